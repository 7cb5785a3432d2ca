use actix_session::Session;

const ADMIN_KEY: &str = "admin_logged_in";
const FLASH_KEY: &str = "flash";

pub fn is_admin(session: &Session) -> bool {
    session.get::<bool>(ADMIN_KEY).unwrap_or(None).unwrap_or(false)
}

pub fn mark_admin(session: &Session) {
    session.renew();
    let _ = session.insert(ADMIN_KEY, true);
}

pub fn set_flash(session: &Session, message: &str) {
    let _ = session.insert(FLASH_KEY, message);
}

pub fn take_flash(session: &Session) -> Option<String> {
    let flash = session.get::<String>(FLASH_KEY).unwrap_or(None);
    if flash.is_some() {
        session.remove(FLASH_KEY);
    }
    flash
}
