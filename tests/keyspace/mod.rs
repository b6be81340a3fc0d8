mod directory_test;
