// Issuance Tests
