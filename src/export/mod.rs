pub mod dump;

pub use dump::{dump_frames, frame_file_name, DumpSettings, ExportError, FrameReadback};
