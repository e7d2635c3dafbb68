fn main() {
    baseplate::interface::cli::run();
}
