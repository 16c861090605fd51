// Activation Tests

mod verify_test;
