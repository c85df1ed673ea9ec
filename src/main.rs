fn main() {
    taclet::cli()
}
