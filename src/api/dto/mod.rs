//! Data Transfer Objects for REST request/response serialization.
//!
//! Stored documents travel as raw JSON; everything else is a typed DTO
//! carrying an OpenAPI schema.

pub mod common_dto;
pub mod data_dto;
pub mod mount_point_dto;
pub mod operations_dto;
pub mod topology_dto;

pub use common_dto::*;
pub use data_dto::*;
pub use mount_point_dto::*;
pub use operations_dto::*;
pub use topology_dto::*;
