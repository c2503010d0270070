pub mod employee_list_response;
pub mod events_response;
pub mod object_list_response;
