// Storage Tests

mod store_test;
