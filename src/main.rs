fn main() {
    if let Err(err) = voxel_forge::run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}
