fn main() {
    selfupdater::init_logging();
    std::process::exit(selfupdater::executor::install_helper::run(std::env::args_os()));
}
