pub mod order_datatypes;
pub mod product;
pub mod review;
pub mod review_connection;
