// Queue Tests

mod merit_test;
