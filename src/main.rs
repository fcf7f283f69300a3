fn main() {
    foodprice_lib::run()
}
