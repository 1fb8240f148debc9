pub mod access_group;
pub mod actor;
pub mod group_membership;
pub mod list_policy;
pub mod policy_grant;
pub mod policy_template;
pub mod target_database;
pub mod target_object;
