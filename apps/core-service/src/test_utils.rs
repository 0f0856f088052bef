//! テストユーティリティ
//!
//! ユースケース・ハンドラ・統合テストで共有するセットアップを提供する。

mod deletion_test_builder;

pub use deletion_test_builder::{CourseFixture, DeletionTestBuilder, DeletionTestSetup};
