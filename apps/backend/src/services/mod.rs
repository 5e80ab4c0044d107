pub mod leaderboard;
pub mod locks;
pub mod notify;
pub mod session_engine;
pub mod sweeper;
