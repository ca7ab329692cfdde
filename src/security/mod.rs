pub mod audit_log;
pub mod ldap;
pub mod rotation;
pub mod token;
