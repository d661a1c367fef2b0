// ABOUTME: Compile-fail test verifying AppGuid and PackageGuid are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use mtadeploy::types::{AppGuid, PackageGuid};

fn takes_app_guid(_id: AppGuid) {}

fn main() {
    let package = PackageGuid::new("pkg-1");
    takes_app_guid(package); // ERROR: expected AppGuid, found PackageGuid
}
