pub mod principal;
pub mod request_id;

pub use principal::{Caller, PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
