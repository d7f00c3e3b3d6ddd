//! Preset values for each narrative axis, paired with the description sent to
//! the narrator when that value is chosen.

pub const STYLES: &[(&str, &str)] = &[
    ("diderot", "Inspiré du XVIIIe siècle, avec des digressions, une adresse au lecteur et un ton espiègle."),
    ("balzac", "Réaliste du XIXe siècle, avec des descriptions détaillées, un souci de la documentation sociale."),
    ("proust", "Phrases longues, introspection, exploration de la mémoire involontaire et du temps."),
    ("camus", "Style sobre, phrases courtes, ton neutre ou détaché, réflexions existentialistes."),
];

pub const PERSONALITIES: &[(&str, &str)] = &[
    ("playful", "Espiègle et joueur, avec un humour léger et des clins d'œil."),
    ("philosophical", "Réfléchi, contemplatif, pose des questions existentielles ou morales."),
    ("ironic", "Ton détaché, critique implicite, décalage entre le dit et le non-dit."),
    ("dramatic", "Intense, met l'accent sur les conflits et les émotions fortes, sens du théâtral."),
    ("absurd", "Décalé, illogique, souligne le non-sens de l'existence ou des situations."),
    ("neutral", "Objectif, factuel, s'efface pour laisser parler les faits ou les personnages."),
];

pub const RELATIONS: &[(&str, &str)] = &[
    ("heterodiegetic", "Le narrateur est extérieur à l'histoire qu'il raconte. Il n'y participe pas comme personnage."),
    ("homodiegetic", "Le narrateur est un personnage à l'intérieur de l'histoire qu'il raconte (principal ou secondaire)."),
    ("autodiegetic", "Cas spécifique d'homodiégétique : le narrateur est le héros/protagoniste de sa propre histoire."),
];

pub const FOCALIZATIONS: &[(&str, &str)] = &[
    ("zero", "Focalisation zéro (Omniscience). Le narrateur sait tout, plus que n'importe quel personnage (pensées, sentiments, passé, futur)."),
    ("internal", "Focalisation interne. Le récit est filtré par la conscience d'un personnage. Le narrateur ne dit que ce que ce personnage sait, pense ou perçoit."),
    ("external", "Focalisation externe. Le narrateur est un observateur neutre, comme une caméra. Il décrit actions et paroles mais n'accède pas aux pensées des personnages."),
];

pub const PERSONS: &[(&str, &str)] = &[
    ("first_person", "Narration à la première personne ('Je'). Souvent liée à un narrateur homodiégétique ou autodiégétique."),
    ("third_person", "Narration à la troisième personne ('Il', 'Elle', 'Ils', 'Elles'). Souvent liée à un narrateur hétérodiégétique."),
    ("second_person", "Narration à la deuxième personne ('Tu', 'Vous'). Plus rare, crée une interpellation directe du personnage."),
];

pub const TENSES: &[(&str, &str)] = &[
    ("past", "Narration au temps du passé (passé simple, imparfait principalement). Crée une distance temporelle, récit rétrospectif classique."),
    ("present", "Narration au temps présent (présent de l'indicatif). Crée un effet d'immédiateté."),
];

pub const GENRES: &[(&str, &str)] = &[
    ("conte_philosophique", "Récit bref visant à illustrer une idée philosophique, souvent avec ironie et personnages stylisés."),
    ("roman_realiste", "Vise à représenter la réalité sociale, historique et humaine de manière fidèle et détaillée."),
    ("roman_naturaliste", "Pousse le réalisme plus loin, influence du déterminisme social et biologique, souvent milieux populaires."),
    ("roman_historique", "Intrigue se déroulant dans un contexte historique passé réel, avec mélange de personnages fictifs et réels."),
    ("roman_epistolaire", "Récit composé de lettres échangées entre personnages."),
    ("roman_apprentissage", "Suit l'évolution et la formation d'un personnage principal, souvent de l'enfance à l'âge adulte."),
    ("science_fiction", "Explore des thèmes liés à la science, la technologie, le futur, l'espace, les sociétés alternatives."),
    ("fantasy", "Met en scène des éléments surnaturels acceptés comme normaux dans l'univers du récit (magie, créatures...)."),
    ("fantastique", "Intrusion du surnaturel dans un cadre réaliste, provoquant le doute et l'hésitation chez le personnage."),
    ("policier", "Centré sur la résolution d'une énigme criminelle, souvent une enquête menée par un détective."),
    ("thriller", "Suspense intense, rythme rapide, menace souvent physique ou psychologique pour le protagoniste."),
    ("nouvelle", "Récit bref, concentré sur une intrigue unique, peu de personnages, chute souvent significative."),
    ("autobiographie", "Récit rétrospectif que fait une personne réelle de sa propre existence."),
    ("memoires", "Récit d'événements historiques ou sociaux auxquels l'auteur a participé ou été témoin."),
];
