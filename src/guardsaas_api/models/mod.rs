pub mod response;

pub mod employee;
pub mod event;
pub mod object;
pub mod portal_id;
