mod book_scenarios;
mod lifecycle_scenarios;
mod property_tests;
