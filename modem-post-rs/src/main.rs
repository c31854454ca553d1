fn main() {
    modem_post::cli::run();
}
