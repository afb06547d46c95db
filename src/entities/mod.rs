pub mod attendance_list;
pub mod attendance_record;
pub mod property_unit;
pub mod proxy;
pub mod vote;
pub mod voting;
pub mod voting_group;
pub mod voting_option;
