pub mod demand;
pub mod edit_link;
pub mod scan;
