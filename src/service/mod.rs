pub mod admin_service;
pub mod client_service;
pub mod dashboard_service;
pub mod notification_service;
pub mod plan_service;
pub mod quote_document;
pub mod quote_service;
pub mod review_service;
pub mod saved_item_service;
pub mod user_service;
