fn main() -> Result<(), Box<dyn std::error::Error>> {
    estilista::cli::main()
}
