//! Block-structured, seekable asset package format.
//!
//! A package ships a tree of asset files as one optionally compressed and
//! encrypted blob.  Files are split into <=8 KiB blocks that compress and
//! encrypt independently, so the reader can serve any byte range by decoding
//! only the blocks it overlaps.  Lookup is by a 32-bit hash of the
//! normalized logical path; the format stores no path strings.
//!
//! ```no_run
//! use blockpak::{PackageBuilder, PackageMount};
//!
//! let mut builder = PackageBuilder::new();
//! builder.set_mount_path("data");
//! builder.add_file("assets/car.mdl", "models/car.mdl");
//! builder.build("out.bpak".as_ref())?;
//!
//! let mount = PackageMount::mount("out.bpak")?;
//! let file = mount.open_logical("data/models/car.mdl")?;
//! let lod0 = file.read_at(0, 4096)?;
//! # Ok::<(), blockpak::PakError>(())
//! ```

pub mod block;
pub mod builder;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod layout;
pub mod mount;
pub mod pathkey;
pub mod reader;

pub use builder::{BuildReport, PackageBuilder, PackedFile};
pub use error::{PakError, PakResult};
pub use layout::{BlockHeader, FileTableEntry, PackageHeader, CHUNK_SIZE};
pub use mount::{PackageMount, VirtualFile};
pub use reader::PackageReader;
