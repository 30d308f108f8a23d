mod attendee_pipeline_tests;
