pub mod order_generator;
