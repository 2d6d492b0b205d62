//! End-to-end runs of the pipeline against in-memory services.

mod mock_services;
mod pipeline_run;
