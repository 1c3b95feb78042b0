//! The virtual machine runtime.
//!
//! Takes no arguments: boots from fixed well-known paths in the working
//! directory, executes until halt or failure, and dumps a full machine
//! traceback on any fatal stop.
//!
//! # Usage
//! ```text
//! wordvm
//! ```
//!
//! # Environment
//! - `hardware/rom`: the program image to execute (`.fb` format)
//! - `hardware/disk`: the persistent disk image, opened read+write
//!
//! # Exit codes
//! - 0: halted successfully
//! - 1: initial allocation failure
//! - 2: initial file access failure
//! - 3: execution failure
//! - 4: screen device failure
//! - 5: keyboard device failure

use std::io;
use std::process;
use wordvm::errors::VmError;
use wordvm::image::Image;
use wordvm::machine::channels::DiskStream;
use wordvm::machine::devices::{HeadlessKeyboard, HeadlessScreen};
use wordvm::machine::vm::Machine;
use wordvm::{error, info};

/// Well-known path of the program image.
const IMAGE_PATH: &str = "hardware/rom";
/// Well-known path of the persistent disk image.
const DISK_PATH: &str = "hardware/disk";

fn main() {
    let image = match Image::read_file(IMAGE_PATH) {
        Ok(image) => image,
        Err(e) => {
            error!("could not access program image '{}': {}", IMAGE_PATH, e);
            process::exit(2);
        }
    };

    let disk = match DiskStream::open(DISK_PATH) {
        Ok(disk) => disk,
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        }
    };

    let mut machine = match Machine::new(image, disk, HeadlessScreen::new(), HeadlessKeyboard::new())
    {
        Ok(machine) => machine,
        Err(e @ VmError::OutOfMemory { .. }) => {
            error!("{}", e);
            process::exit(1);
        }
        Err(e) => {
            error!("{}", e);
            process::exit(failure_exit_code(&e));
        }
    };

    if let Err(e) = machine.run() {
        error!("{}", e);
        let mut stderr = io::stderr().lock();
        let _ = machine.traceback(&mut stderr);
        process::exit(failure_exit_code(&e));
    }

    info!("halted successfully");
}

/// Maps a runtime failure onto its exit-code class.
fn failure_exit_code(err: &VmError) -> i32 {
    match err {
        VmError::Screen { .. } => 4,
        VmError::Keyboard { .. } => 5,
        _ => 3,
    }
}
