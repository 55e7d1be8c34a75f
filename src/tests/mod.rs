// Test modules for the negotiation chat
// Each module covers the corresponding source module

mod chat_tests;
mod helpers;
mod memory_tests;
mod poller_tests;
