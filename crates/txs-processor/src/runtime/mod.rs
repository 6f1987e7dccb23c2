pub mod bounded_queue;
