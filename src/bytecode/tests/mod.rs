mod compiler_tests;
mod vm_tests;
