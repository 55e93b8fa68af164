use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;

use flate2;


/// Open a source file, transparently decompressing gzip based on the file
/// extension. Snapshot archives of the upstream feeds arrive gzipped.
pub fn magic_open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn Read>> {
	let path = path.as_ref();
	match path.extension() {
		Some(x) if x == "gz" => {
			Ok(Box::new(flate2::read::GzDecoder::new(fs::File::open(path)?)))
		},
		_ => Ok(Box::new(fs::File::open(path)?)),
	}
}


/// Create an output file inside `dir`, creating the directory first if
/// needed.
pub fn create_output<P: AsRef<Path>>(dir: P, name: &str) -> io::Result<fs::File> {
	let dir = dir.as_ref();
	fs::create_dir_all(dir)?;
	fs::File::create(dir.join(name))
}
