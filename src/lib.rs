pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;
pub mod store;

pub mod models {
    pub mod participant;
    pub mod trip;
}

pub mod services {
    pub mod mail;
    pub mod notify;
}
