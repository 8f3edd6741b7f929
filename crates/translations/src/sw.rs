//! Swahili copy.

pub(crate) static ENTRIES: &[(&str, &str)] = &[
    ("app.name", "Dalali Kiganjani"),
    ("app.tagline", "Pata madalali wanaoaminika karibu nawe"),
    ("nav.home", "Nyumbani"),
    ("nav.findBroker", "Tafuta Dalali"),
    ("nav.messages", "Ujumbe"),
    ("nav.requests", "Maombi"),
    ("nav.profile", "Wasifu"),
    ("nav.dashboard", "Dashibodi"),
    ("language.title", "Chagua lugha yako"),
    ("language.continue", "Endelea"),
    ("onboarding.next", "Ifuatayo"),
    ("onboarding.skip", "Ruka"),
    ("onboarding.getStarted", "Anza sasa"),
    ("permissions.location.title", "Ruhusu ufikiaji wa mahali"),
    ("permissions.location.body", "Tunatumia mahali ulipo kukuonyesha madalali walio karibu."),
    ("permissions.allow", "Ruhusu"),
    ("permissions.deny", "Si sasa"),
    ("auth.login", "Ingia"),
    ("auth.register", "Fungua akaunti"),
    ("auth.logout", "Toka"),
    ("auth.emailOrPhone", "Barua pepe au namba ya simu"),
    ("auth.password", "Nenosiri"),
    ("auth.otp.title", "Weka msimbo wa uthibitisho"),
    ("auth.error.noAccount", "Hakuna akaunti. Tafadhali jisajili kwanza."),
    ("auth.error.invalidCredentials", "Barua pepe/simu au nenosiri si sahihi."),
    ("auth.error.duplicate", "Akaunti yenye barua pepe au simu hii tayari ipo."),
    ("auth.error.notAuthenticated", "Tafadhali ingia ili kuendelea."),
    ("broker.verified", "Amethibitishwa"),
    ("broker.online", "Yupo mtandaoni"),
    ("broker.reviews", "maoni"),
    ("broker.contact", "Wasiliana na dalali"),
    ("broker.become", "Kuwa dalali"),
    ("filters.title", "Vichujio"),
    ("filters.reset", "Weka upya"),
    ("filters.service", "Aina ya huduma"),
    ("filters.rating", "Ukadiriaji"),
    ("filters.price", "Kiwango cha bei"),
    ("filters.distance", "Umbali"),
    ("filters.verifiedOnly", "Madalali waliothibitishwa pekee"),
    ("filters.all", "Zote"),
    ("service.realEstate", "Nyumba na viwanja"),
    ("service.carSales", "Uuzaji wa magari"),
    ("service.carRental", "Kukodisha magari"),
    ("service.land", "Ardhi"),
    ("service.commercial", "Biashara"),
    ("service.rental", "Nyumba za kupanga"),
    ("price.low", "Nafuu"),
    ("price.medium", "Wastani"),
    ("price.high", "Ghali"),
    ("request.status.pending", "Inasubiri"),
    ("request.status.accepted", "Imekubaliwa"),
    ("request.status.in_progress", "Inaendelea"),
    ("request.status.completed", "Imekamilika"),
    ("request.status.cancelled", "Imeghairiwa"),
    ("request.cancel", "Ghairi ombi"),
    ("review.write", "Andika maoni"),
    ("review.anonymous", "Tuma bila jina"),
    ("dashboard.listings", "Matangazo yangu"),
    ("dashboard.orders", "Oda"),
    ("dashboard.marketing", "Zana za masoko"),
    ("common.loading", "Inapakia..."),
    ("common.retry", "Jaribu tena"),
    ("common.dismiss", "Funga"),
];
