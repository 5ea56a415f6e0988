pub mod admin_dto;
pub mod client_dto;
pub mod common;
pub mod dashboard_dto;
pub mod document_dto;
pub mod notification_dto;
pub mod quote_dto;
pub mod review_dto;
pub mod saved_item_dto;
pub mod user_dto;
