mod analysis_tests;
mod helpers;
