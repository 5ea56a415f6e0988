pub mod admin_router;
pub mod client_router;
pub mod dashboard_router;
pub mod notification_router;
pub mod quote_router;
pub mod review_router;
pub mod saved_item_router;
pub mod user_router;
