mod integration {
    mod analyze_tests;
    mod app_tests;
    mod common;
    mod config_tests;
    mod crossfw_tests;
    mod removal_tests;
}
