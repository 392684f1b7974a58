pub mod config;
pub mod guilds;
pub mod run;
