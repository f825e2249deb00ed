pub mod import_xlsx;
pub mod load_markets;
pub mod route;
