pub mod configuration;
pub mod dispatch;
pub mod domain;
pub mod email_client;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod template;
