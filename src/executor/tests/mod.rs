mod helpers;
mod interp_tests;
mod statement_tests;
