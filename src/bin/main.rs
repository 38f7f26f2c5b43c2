fn main() {
  lode::main()
}
