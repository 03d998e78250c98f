#[macro_use]
extern crate rocket;

#[launch]
fn rocket() -> _ {
    apply_orchestrator::rocket()
}
