//! Fixed test IDs for deterministic tests.

use uuid::Uuid;

// User IDs (100-199)
pub const TEST_USER_ALICE: Uuid = Uuid::from_u128(100);

// Token IDs (1000-1099)
pub const TEST_TOKEN_ID_1: Uuid = Uuid::from_u128(1000);

// Role names
pub const ROLE_ADMIN: &str = "Admin";
pub const ROLE_EDITOR: &str = "Editor";
pub const ROLE_VIEWER: &str = "Viewer";
