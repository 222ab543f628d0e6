//! Data models for Bookshelf

pub mod assignment;
pub mod book;
pub mod stats;
pub mod user;

// Re-export commonly used types
pub use assignment::{Assignment, AssignmentDetails, AssignmentStatus, BorrowRequest, ReturnRequest};
pub use book::Book;
pub use stats::LibraryStats;
pub use user::{User, UserRole, UserStatus};
