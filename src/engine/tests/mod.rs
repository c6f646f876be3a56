mod helpers;
mod render_tests;
