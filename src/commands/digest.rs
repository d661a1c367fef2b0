// ABOUTME: Digest command implementation.
// ABOUTME: Prints the content digest the upload step compares against.

use mtadeploy::error::Result;
use mtadeploy::files::archive::module_digest;
use mtadeploy::output::Output;
use std::path::Path;

pub fn digest(archive: &Path, entry: &str, max_size: u64, output: Output) -> Result<()> {
    let mut file = std::fs::File::open(archive)?;
    let digest = module_digest(&mut file, entry, max_size)?;
    output.result("digest", &digest);
    Ok(())
}
